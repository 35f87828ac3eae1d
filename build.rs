fn main() {
    // Stamp the build timestamp into the binary for the run log's stats stanza.
    let build_date = chrono::Utc::now().format("%d.%m.%Y %H:%M:%S").to_string();
    println!("cargo:rustc-env=SYS_PATCH_BUILD_DATE={build_date}");
}
