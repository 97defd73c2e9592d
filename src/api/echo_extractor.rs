//! An `Extractor` for test mode: the image bytes are taken to be the extractor's JSON reply.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the
//! whole app, top-to-bottom, without calling an LLM.

use crate::api::{parse_response, Extraction, Extractor, Rejection};
use crate::model::ImageInput;
use crate::Result;

pub(crate) struct EchoExtractor;

#[async_trait::async_trait]
impl Extractor for EchoExtractor {
    async fn extract(&mut self, image: &ImageInput) -> Result<Extraction> {
        match std::str::from_utf8(image.bytes()) {
            Ok(text) => parse_response(text),
            Err(_) => Ok(Extraction::Rejected(Rejection::new(format!(
                "{} is not readable in test mode",
                image.file_name()
            )))),
        }
    }
}
