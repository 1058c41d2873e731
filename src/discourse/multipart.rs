//! Hand-built `multipart/form-data` bodies for image uploads.

use rand::Rng;

use crate::attachment::Attachment;
use crate::constants::BOUNDARY_PREFIX;

/// A multipart body and the boundary it was built with.
#[derive(Debug)]
pub(crate) struct MultipartBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Fresh boundary: fixed prefix plus 32 hex characters.
pub(crate) fn generate_boundary() -> String {
    let random: [u8; 16] = rand::thread_rng().gen();
    format!("{BOUNDARY_PREFIX}{}", hex::encode(random))
}

/// Build the upload body: the file, then `type=composer`, then
/// `synchronous=true`.
pub(crate) fn upload_body(attachment: &Attachment) -> MultipartBody {
    build_upload_body(attachment, generate_boundary())
}

fn build_upload_body(attachment: &Attachment, boundary: String) -> MultipartBody {
    let mime = mime_guess::from_ext(&attachment.extension).first_or_octet_stream();
    let file_name = attachment.file_name().replace('"', "%22");

    let mut bytes = Vec::with_capacity(attachment.bytes.len() + 512);
    bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    bytes.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    bytes.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    bytes.extend_from_slice(&attachment.bytes);
    bytes.extend_from_slice(b"\r\n");

    for (name, value) in [("type", "composer"), ("synchronous", "true")] {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }

    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    MultipartBody { boundary, bytes }
}
