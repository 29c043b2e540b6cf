use std::{env, fs, fs::File, io::prelude::*, path::Path};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=checks/");

    let out_dir = env::var("OUT_DIR")?;
    let dest_checks_path = Path::new(&out_dir).join("all-checks.yaml");

    let mut paths: Vec<_> = fs::read_dir("./checks")?.filter_map(Result::ok).collect();
    paths.sort_by_key(std::fs::DirEntry::path);

    let mut all_group_checks = String::new();
    for entry in &paths {
        let contents = fs::read_to_string(entry.path())?;
        all_group_checks.push_str(&contents);
        all_group_checks.push('\n');
    }

    let mut file = File::create(dest_checks_path)?;
    file.write_all(all_group_checks.as_bytes())?;

    Ok(())
}
