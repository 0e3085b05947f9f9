//! `device-reporter devices` - page through a unit's stored devices.

use anyhow::Result;
use clap::Args;
use device_reporter::query::{devices_page, DevicePage, PageRequest, DEFAULT_LIMIT, DEFAULT_PAGE};
use device_reporter_db::DeviceDb;

use crate::cli::output::{print_table, truncate};

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Unit GUID to list devices for
    #[arg(value_name = "UNIT_GUID")]
    pub unit_guid: String,

    /// Page number, starting at 1
    #[arg(long, default_value_t = DEFAULT_PAGE)]
    pub page: u64,

    /// Devices per page (1-100)
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(db: &DeviceDb, args: DevicesArgs) -> Result<()> {
    let request = PageRequest::new(args.page, args.limit)?;
    let page = devices_page(db, &args.unit_guid, request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    print_page(&args.unit_guid, &page);
    Ok(())
}

fn print_page(unit_guid: &str, page: &DevicePage) {
    if page.devices.is_empty() {
        println!("No devices for unit {} on page {}.", unit_guid, page.pagination.page);
        return;
    }

    let rows = page
        .devices
        .iter()
        .map(|d| {
            vec![
                d.n.to_string(),
                d.msg_id.clone(),
                truncate(&d.text, 40),
                d.class.clone(),
                d.level.to_string(),
                d.area.clone(),
                d.addr.clone(),
            ]
        })
        .collect();

    print_table(&["N", "MSG ID", "TEXT", "CLASS", "LEVEL", "AREA", "ADDR"], rows);
    println!(
        "Page {} of {} ({} devices)",
        page.pagination.page, page.pagination.total_pages, page.pagination.total
    );
}
