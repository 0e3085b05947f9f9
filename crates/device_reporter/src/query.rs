//! Paged reads of persisted devices.

use crate::store::DeviceReader;
use anyhow::Result;
use device_reporter_db::Device;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("invalid page, must be at least 1")]
    Page,
    #[error("invalid limit, must be in [1;100]")]
    Limit,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Result<Self, PageError> {
        if page == 0 {
            return Err(PageError::Page);
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(PageError::Limit);
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevicePage {
    pub devices: Vec<Device>,
    pub pagination: Pagination,
}

/// Fetch one page of a unit's devices.
pub async fn devices_page(
    reader: &dyn DeviceReader,
    unit_guid: &str,
    request: PageRequest,
) -> Result<DevicePage> {
    let (devices, total) = reader
        .devices_by_unit(unit_guid, request.limit(), request.offset())
        .await?;

    Ok(DevicePage {
        devices,
        pagination: Pagination {
            page: request.page(),
            limit: request.limit(),
            total,
            total_pages: total.div_ceil(request.limit()),
        },
    })
}
