//! Object-type selection for create and upload calls.
//!
//! The asset service stores images and generic documents under different
//! object types. A file counts as an image only when its MIME type says so
//! AND its extension is in the supported set; everything else goes down the
//! document path.

use assetlink_common::filename::extract_file_extension;
use assetlink_common::types::{FileInfo, FileMetadata};

/// Which call the object type is being selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    /// Object creation.
    Create,
    /// Content upload.
    Upload,
}

/// Image extensions the service renders natively.
const DEFAULT_IMAGE_EXTENSIONS: [&str; 7] = ["jpeg", "jpg", "gif", "png", "heic", "heif", "webp"];

/// Whether a file should be treated as a service-renderable image.
///
/// `supported_mime_types` overrides the built-in extension set when
/// non-empty; entries may be full MIME types (`image/heic`) or bare
/// subtypes (`heic`).
pub fn is_supported_image(file_name: &str, mime_type: &str, supported_mime_types: &[String]) -> bool {
    if !mime_type.contains("image") {
        return false;
    }

    let extension = extract_file_extension(file_name).trim_start_matches('.');
    if extension.is_empty() {
        return false;
    }

    if supported_mime_types.is_empty() {
        return DEFAULT_IMAGE_EXTENSIONS.contains(&extension);
    }

    supported_mime_types.iter().any(|supported| {
        let subtype = supported
            .rsplit_once('/')
            .map_or(supported.as_str(), |(_, subtype)| subtype);
        subtype == extension
    })
}

/// Object type to send for a create or upload call.
pub fn object_type_for(file: &FileInfo, operation: ApiOperation, supported_mime_types: &[String]) -> &'static str {
    if is_supported_image(&file.name, &file.mime_type, supported_mime_types) {
        match operation {
            ApiOperation::Create => "sharing/image",
            ApiOperation::Upload => "image",
        }
    } else {
        match operation {
            ApiOperation::Create => "sharing/file",
            ApiOperation::Upload => "original",
        }
    }
}

/// View kind to poll for an uploaded attachment.
pub fn view_kind(metadata: &FileMetadata, supported_mime_types: &[String]) -> &'static str {
    if is_supported_image(&metadata.name, &metadata.mime_type, supported_mime_types) {
        "image_fullsize"
    } else {
        "original"
    }
}
