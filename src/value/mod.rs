//! BSON-like value model: [`Value`], [`Document`] and [`ObjectId`].

mod codec;
mod document;
mod objectid;

pub use document::Document;
pub use objectid::ObjectId;
pub use document::Value;
