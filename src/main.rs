//! # image-finder CLI
//!
//! Command-line interface for the image fingerprint index.
//!
//! ## Usage
//! ```bash
//! image-finder scan /Volumes/Photos --prefix archive
//! image-finder search ~/Desktop/IMG_0042.JPG --threshold 0.85
//! image-finder stats --prefix archive
//! ```

mod cli;

use image_finder::Result;

fn main() -> Result<()> {
    cli::run()
}
