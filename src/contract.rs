//! Contract between the export pipeline and the device.
//!
//! The pipeline never talks to the tablet directly: it enumerates documents
//! and pulls their contents through [`DeviceClient`] only. The production
//! implementation is [`crate::device::UsbWebClient`]; tests substitute the
//! generated `MockDeviceClient`.

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-device-mocks"))]
use mockall::automock;

use crate::document::{DocumentNode, DocumentTree};
use crate::error::DeviceError;

#[cfg_attr(any(test, feature = "test-device-mocks"), automock)]
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Fetches the complete document hierarchy from the device.
    async fn fetch_file_structure(&self) -> Result<DocumentTree, DeviceError>;

    /// Writes one representation of `doc` to `dest`. The destination's
    /// extension selects the format: `.rmdoc` for the raw archive, anything
    /// else for the PDF rendered by the device.
    async fn export_doc(&self, doc: &DocumentNode, dest: &Path) -> Result<(), DeviceError>;
}
