#![allow(dead_code)]

mod helpers;
mod scripted_backend;

pub use helpers::*;
pub use scripted_backend::*;
