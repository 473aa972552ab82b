pub mod beatstars;
pub mod traits;
pub mod youtube;
