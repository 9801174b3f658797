//! Output generation for the Markdown archive.
//!
//! # Submodules
//!
//! - [`archive`]: writes the archive, either rebuilt whole or appended to
//! - [`index`]: parses archive sections back and reconciles them with the ledger
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── unchained-archive.md   # sections in listing order
//! └── checkpoint.json        # slug -> {title, url, date, scraped_at}
//! ```

pub mod archive;
pub mod index;
