//! XML support for kiln.
//!
//! - [`XmlNode`] - a small element tree parsed and written with quick-xml
//! - [`codec`] - saving and loading reflected instances as XML
//! - [`config`] - settings files built on the codec
//!
//! # Example
//!
//! ```
//! use kiln_reflect::{reflect_class, ReflectedMut, ReflectedRef};
//! use kiln_xml::{codec, SaveFlags, XmlNode};
//!
//! #[derive(Default)]
//! struct Export {
//!     level: u32,
//!     strip: bool,
//! }
//!
//! reflect_class! {
//!     Export {
//!         level,
//!         strip,
//!     }
//! }
//!
//! let export = Export { level: 3, strip: true };
//! let mut doc = XmlNode::document();
//! codec::save_v2(ReflectedRef::new(&export), &mut doc, SaveFlags::class_node())?;
//!
//! let mut loaded = Export::default();
//! codec::load_v2(&mut ReflectedMut::new(&mut loaded), &doc, true)?;
//! assert_eq!(loaded.level, 3);
//! assert!(loaded.strip);
//! # Ok::<(), kiln_xml::Error>(())
//! ```

pub mod codec;
pub mod config;
mod error;
mod node;

pub use codec::{find_class_node, load, load_v2, save, save_v2, SaveFlags};
pub use config::ConfigFile;
pub use error::{Error, Result};
pub use node::XmlNode;
