//! Human-readable rendering of engine results.

use depotkeep_core::keystore::UpsertMode;
use depotkeep_core::{DependentSet, DepotNames, ItemId, KeyRecord, RemoteLookup};
use depotkeep_engine::{
    InstallReport, InstalledItem, Plan, Presence, StepOutcome, StepReport, UninstallReport,
};
use depotkeep_storage::SlotEntry;
use std::collections::BTreeMap;

pub fn print_steps(steps: &[StepReport]) {
    for report in steps {
        match &report.outcome {
            StepOutcome::Completed => println!("  ✓ {}", report.step),
            StepOutcome::Skipped => println!("  - {} (nothing to do)", report.step),
            StepOutcome::Failed(reason) => println!("  ✗ {}: {reason}", report.step),
        }
    }
}

pub fn print_plan(item: &ItemId, plan: &Plan) {
    println!("Item: {item}");
    println!("Slots used: {}/{}", plan.used, plan.capacity);
    println!("Slots free: {}", plan.remaining);
    println!("Dependents requested: {}", plan.requested);
    println!("Dependents that fit: {}", plan.max_dependents);
}

pub fn print_install_report(report: &InstallReport, names: &DepotNames) {
    println!("Install of {}:", report.item);
    print_steps(&report.steps);

    if !report.slots_added.is_empty() {
        println!("\nWhitelisted:");
        for entry in &report.slots_added {
            println!("  {} {}", slot_label(entry), label(&entry.id, names));
        }
    }
    if let Some(path) = &report.manifest_path {
        println!("\nManifest record: {}", path.display());
    }
    for path in &report.depot_manifests {
        println!("Depot manifest: {}", path.display());
    }
    match report.keystore_mode {
        Some(UpsertMode::Spliced) => println!("Keys written: {}", report.keys_written),
        Some(UpsertMode::Synthesized { discarded }) => {
            println!("Keys written: {} (key store rebuilt)", report.keys_written);
            if discarded {
                println!("  previous key store content was replaced; a .bak copy was kept");
            }
        }
        None => {}
    }
}

pub fn print_uninstall_report(report: &UninstallReport) {
    println!("Uninstall of {}:", report.dependents.primary());
    print_steps(&report.steps);

    println!("\nDependents: {}", describe_set(&report.dependents));
    println!("Slots removed: {}", report.slots_removed);
    println!(
        "Manifest record: {}",
        if report.manifest_removed { "removed" } else { "not found" }
    );
    for path in &report.residual_manifests {
        println!("Removed depot manifest: {}", path.display());
    }
    if !report.keys_removed.is_empty() {
        let ids: Vec<String> = report.keys_removed.iter().map(ItemId::to_string).collect();
        println!("Keys removed: {}", ids.join(", "));
    }
    if !report.removed_anything() {
        println!("\nNothing referenced {}.", report.dependents.primary());
    }
}

pub fn print_presence(presence: &Presence, names: &DepotNames) {
    println!("Item: {}", presence.item);
    println!("State: {}", presence.state);
    println!("Whitelisted: {}", presence.whitelisted);
    match &presence.manifest {
        Some(manifest) => {
            println!("Name: {}", manifest.name);
            println!("Install dir: {}", manifest.install_dir);
            println!("Depots in record: {}", manifest.depots.len());
            for depot in &manifest.depots {
                let whitelisted = presence.whitelisted_dependents.contains(depot);
                let keyed = presence.keyed_dependents.contains(depot);
                println!(
                    "  {:<40} whitelisted={whitelisted:<5} key={keyed}",
                    label(depot, names)
                );
            }
        }
        None => println!("Manifest record: none"),
    }
}

pub fn print_installed(items: &[InstalledItem]) {
    if items.is_empty() {
        println!("No installed items found.");
        return;
    }
    println!("{:<12} {:<40} {:<10}", "ID", "Name", "Dependents");
    println!("{}", "-".repeat(64));
    for item in items {
        println!(
            "{:<12} {:<40} {:<10}",
            item.manifest.appid,
            item.manifest.name,
            item.dependents.len()
        );
    }
}

pub fn print_slots(entries: &[SlotEntry], count: usize, capacity: usize, names: &DepotNames) {
    for entry in entries {
        println!("{:<6} {}", slot_label(entry), label(&entry.id, names));
    }
    println!("\n{count}/{capacity} slots used");
}

pub fn print_keys(keys: &BTreeMap<ItemId, String>, names: &DepotNames) {
    if keys.is_empty() {
        println!("No depot keys found.");
        return;
    }
    for (depot, key) in keys {
        println!("{:<40} {key}", label(depot, names));
    }
}

pub fn print_key_records(records: &[KeyRecord]) {
    for record in records {
        println!("{} {}", record.depot, record.key);
    }
}

pub fn print_dependent_set(set: &DependentSet, names: &DepotNames) {
    println!("Item: {}", set.primary());
    println!("Source: {}", describe_set(set));
    for id in set.dependents() {
        println!("  {}", label(id, names));
    }
}

fn describe_set(set: &DependentSet) -> String {
    let local = if set.local_record {
        "local record"
    } else {
        "no local record"
    };
    let remote = match set.remote {
        RemoteLookup::Skipped => "remote not queried".to_string(),
        RemoteLookup::Unavailable => "remote unavailable".to_string(),
        RemoteLookup::Found(n) => format!("remote returned {n}"),
    };
    format!("{} ({local}, {remote})", set.dependent_count())
}

fn slot_label(entry: &SlotEntry) -> String {
    match entry.slot {
        Some(n) => format!("#{n}"),
        None => "#?".to_string(),
    }
}

fn label(id: &ItemId, names: &DepotNames) -> String {
    if names.is_empty() {
        return id.to_string();
    }
    format!("{id} {}", names.name_of(id))
}
