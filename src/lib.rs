//! A Rust library for low-level PDF object-graph parsing and rebuilding.
//!
//! The crate reads a document's indirect-object graph into a [`Context`],
//! lets callers build and rewire objects through it, and serializes the
//! graph back out with either a classic cross-reference table or a
//! cross-reference stream with packed object streams.
//!
//! ```
//! use pdfgraph::{dictionary, Context, ParseOptions, SaveOptions};
//!
//! let mut context = Context::new();
//! let catalog = context.register(dictionary! {"Type" => "Catalog"});
//! context.trailer.set("Root", catalog);
//!
//! let bytes = context.save_to_bytes(&SaveOptions::default()).unwrap();
//! let reloaded = pdfgraph::parse_document(&bytes, &ParseOptions::default()).unwrap();
//! assert!(reloaded.get_object(catalog).is_ok());
//! ```

mod content;
mod context;
mod cursor;
mod error;
pub mod filters;
mod object;
mod object_stream;
mod parser;
mod text;
mod writer;
mod xref;

pub use content::{Content, Operation};
pub use context::Context;
pub use cursor::ByteCursor;
pub use error::{Error, Position, Result};
pub use object::{DictClass, Dictionary, Object, ObjectId, ObjectKind, Stream, StringFormat};
pub use parser::{parse_document, parse_document_with, parse_single_object, ParseOptions};
pub use text::{decode_text, encode_utf16_be, text_string};
pub use writer::{SaveOptions, Writer};
pub use xref::{Xref, XrefEntry};
