//! Film accumulation and image output for retired radiance.

mod file;
mod film;

pub use file::{OutputError, PngOutput};
pub use film::Film;
