pub mod candidate_scorer;
pub mod color_profile;
pub mod color_segmenter;
pub mod contour;
pub mod geometric_gate;
pub mod mask;
#[cfg(feature = "opencv")]
pub mod opencv_ops;
pub mod pixel;
pub mod record;
pub mod temporal_gate;
pub mod trajectory;
