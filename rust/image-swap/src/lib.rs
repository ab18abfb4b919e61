#![warn(missing_docs)]

//! Decision engine behind a content script that swaps the images of a web
//! page for deterministic placeholders from `picsum.photos`.
//!
//! The engine never touches a browser API directly. Everything it reads or
//! changes on the page goes through a [Document], and everything it knows
//! about the user's configuration arrives as an immutable [Settings]
//! snapshot read from a [SettingsStore]:
//!
//! ```text
//! SettingsStore ──▸ Settings ──▸ SiteScope ──▸ ReplacementPolicy
//!                                                  ▲       │
//!        seed / dimensions ────────────────────────┘       ▼
//!                                                       Document
//!        ObserverBridge ◂── mutation records ───────────────┘
//! ```
//!
//! A [ContentScript] ties these together for one page. It is driven by a
//! host that forwards page events ([PageSignal]) and commands from the
//! extension UI ([Command]):
//!
//! ```rust
//! use image_swap::{ContentScript, Document, MemoryDocument, Settings};
//!
//! let mut document = MemoryDocument::new();
//! let body = document.body().unwrap();
//! let image = document.create_element("img");
//! document.set_attribute(&image, "id", "a");
//! document.set_attribute(&image, "width", "50");
//! document.set_attribute(&image, "height", "50");
//! document.append_child(body, image);
//!
//! let mut script = ContentScript::new("https://example.com/", Settings::default());
//! script.start(&mut document);
//!
//! assert_eq!(
//!     document.attribute(&image, "src").as_deref(),
//!     Some("https://picsum.photos/seed/117529463/50/50")
//! );
//! ```

pub mod constants;

mod error;
pub use error::*;

mod settings;
pub use settings::*;

mod store;
pub use store::*;

pub mod pattern;
pub use pattern::SiteScope;

mod document;
pub use document::*;

mod selector;
pub use selector::*;

mod seed;
pub use seed::*;

mod target;
pub use target::*;

mod marks;
pub use marks::*;

mod policy;
pub use policy::*;

mod observer;
pub use observer::*;

mod command;
pub use command::*;

mod script;
pub use script::*;
