/// Driver adapter a physical SDR receiver is tuned and gain-staged through.
/// Concrete `osmosdr`/`uhd` implementations are out of scope (spec section
/// 1); this crate specifies only the seam they'd plug into, the same way
/// the teacher's `CaptureHandler` trait specifies the seam a platform's
/// camera/screen capture backend plugs into without this crate knowing
/// about Windows Media Foundation or V4L2.
pub trait SdrFrontEnd: Sync + Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts streaming I/Q samples at the given center frequency and rate.
    fn start(&self, center_freq: f64, sample_rate: f64) -> Result<(), Self::Error>;

    fn stop(&self) -> Result<(), Self::Error>;

    /// Applies a post-construction frequency correction, e.g. from autotune.
    fn set_freq_corr(&self, ppm: f64) -> Result<(), Self::Error>;

    fn set_gain(&self, stage: &str, value: i32) -> Result<(), Self::Error>;
}
