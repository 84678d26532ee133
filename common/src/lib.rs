pub mod api;
pub mod circuit;
pub mod config;
pub mod crypto;
pub mod environment;
pub mod fee;
pub mod serializer;
pub mod time;
pub mod transaction;
pub mod utils;

// Compile-time invariant checks for configuration constants
#[macro_export]
macro_rules! static_assert {
    ($cond:expr, $msg:expr) => {
        const _: () = assert!($cond, $msg);
    };
}
