pub mod analyzer;
pub mod capture;
pub mod debounce;
pub mod face;
pub mod frame;
pub mod pixel;
pub mod retake;
pub mod skin_detector;
pub mod stamp;
pub mod status;
