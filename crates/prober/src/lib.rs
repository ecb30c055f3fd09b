//! Site prober - one HTTP check per site definition
//!
//! Renders the `{account}` template, sends a single request under a strict
//! timeout and classifies the response against the site's existence signal.

mod prober;
mod template;

pub use prober::{HttpProber, HttpProberOptions, MAX_BODY_BYTES};
pub use template::{render_body, render_uri};
