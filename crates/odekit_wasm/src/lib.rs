//! WASM bridge exposing the odekit kernel to the browser front end.

mod searches;
mod system;

pub use system::WasmOde;
