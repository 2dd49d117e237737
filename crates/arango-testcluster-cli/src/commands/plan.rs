//! Prints the topology a configuration resolves to.

use anyhow::{Context, Result};
use arango_testcluster::{ClusterHandle, build_cluster};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};

use super::{ClusterArgs, resolve_config};

pub fn run(dir: &str, json: bool, args: &ClusterArgs) -> Result<()> {
    let config = resolve_config(dir, args)?;
    let handle = build_cluster(&config).context("Failed to build cluster topology")?;

    if json {
        let plan = serde_json::json!({
            "image": handle.image(),
            "user": handle.user(),
            "auth": handle.auth_mode(),
            "nodes": handle.nodes().collect::<Vec<_>>(),
            "hosts_and_ports": handle.hosts_and_ports(),
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_table(&handle);
    }

    Ok(())
}

fn print_table(handle: &ClusterHandle) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Alias").fg(Color::Blue),
        Cell::new("Role").fg(Color::Blue),
        Cell::new("Endpoint").fg(Color::Blue),
        Cell::new("Host Port").fg(Color::Blue),
        Cell::new("Depends On").fg(Color::Blue),
    ]);

    for node in handle.nodes() {
        let port = node
            .exposed_port()
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        table.add_row(vec![
            Cell::new(node.alias()),
            Cell::new(node.role()),
            Cell::new(node.endpoint()),
            Cell::new(port),
            Cell::new(node.depends_on().join(", ")),
        ]);
    }

    println!("{table}");
    println!();
    println!("Image: {}", handle.image());
    let entries: Vec<String> = handle
        .hosts_and_ports()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Coordinators: {}", entries.join(", "));
}
