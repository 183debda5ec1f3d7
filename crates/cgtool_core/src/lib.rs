//! Extraction and merge pipeline for Chinese-variant conversion groups
//! ("CGroups") authored on zh.wikipedia.org as Lua modules and wikitext
//! templates. The library turns raw page text into canonical
//! [`group::ConversionGroup`] records and folds stored records into the
//! single timestamped artifact the web UI consumes.

pub mod client;
pub mod dicts;
pub mod group;
pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod rules;
pub mod store;
pub mod validate;
