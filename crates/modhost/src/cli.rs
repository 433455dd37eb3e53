use modhost_core::environment::{EnvironmentReport, UpdateScan};
use modhost_core::{BootReport, ModuleView};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}

pub fn print_boot(report: &BootReport, json: bool) {
    if json {
        return print_json(report);
    }
    println!(
        "Loaded {} modules ({} errors)",
        report.load.loaded.len(),
        report.load.errors.len()
    );
    for view in &report.load.loaded {
        println!("  - {}", view.name);
    }
    for signal in &report.readiness {
        if signal.raised {
            println!("{} raised by {}, handled by {}", signal.event, signal.provider, signal.handled);
        } else {
            println!("{} skipped: {} not loaded", signal.event, signal.provider);
        }
    }
}

pub fn print_modules(views: &[ModuleView], json: bool) {
    if json {
        return print_json(views);
    }
    for view in views {
        println!(
            "{}\t{}\t{}\t{}\t{}{}",
            view.name,
            view.type_name,
            if view.category.is_empty() { "-" } else { view.category.as_str() },
            view.state,
            if view.binary.is_empty() { "-" } else { view.binary.as_str() },
            if view.enabled { "" } else { "\t(disabled)" }
        );
    }
}

pub fn print_answer(answer: Option<&str>, json: bool) {
    if json {
        return print_json(&serde_json::json!({ "answer": answer }));
    }
    println!("{}", answer.unwrap_or("(no answer)"));
}

pub fn print_event(name: &str, handled: usize, json: bool) {
    if json {
        return print_json(&serde_json::json!({ "event": name, "handled": handled }));
    }
    println!("{}: handled by {} modules", name, handled);
}

pub fn print_environment(report: &EnvironmentReport, json: bool) {
    if json {
        return print_json(report);
    }
    println!("Root: {}", report.root_directory.display());
    println!("Module folders:");
    for folder in &report.module_folders {
        println!("  {}", folder.display());
    }
    println!("External resources:");
    for resource in &report.external_resources {
        println!("  {} ({}): {}", resource.name, resource.kind, resource.path.display());
    }
    println!("Configuration files: {}", report.configuration_files.len());
    println!("Admin instances: {}", report.admin_instances.len());
}

pub fn print_scan(scan: &UpdateScan, json: bool) {
    if json {
        return print_json(scan);
    }
    for info in &scan.folder_details {
        println!(
            "{}\t{} files\t{} subfolders",
            info.path.display(),
            info.file_count,
            info.subdirectories.len()
        );
    }
}
