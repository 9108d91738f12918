use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-changed=src/error.rs");
    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=Skipping cbindgen: CARGO_MANIFEST_DIR is not set");
        return;
    };
    let out_dir = PathBuf::from(&crate_dir).join("include");
    if let Err(err) = std::fs::create_dir_all(&out_dir) {
        println!("cargo:warning=Skipping cbindgen: {err}");
        return;
    }

    let config = match cbindgen::Config::from_file("cbindgen.toml") {
        Ok(config) => config,
        Err(err) => {
            println!("cargo:warning=Skipping cbindgen: {err}");
            return;
        }
    };

    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("xshape.h"));
        }
        Err(err) => {
            println!("cargo:warning=Skipping cbindgen generation: {err}");
        }
    }
}
