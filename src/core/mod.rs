// Core modules: column addressing, request planning, cell decoding, and error modeling.
pub mod binary;
pub mod cell;
pub mod column;
pub mod decode;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod options;
pub mod request;
