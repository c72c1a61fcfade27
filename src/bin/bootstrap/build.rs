fn main() {
    // Managed code finds the native hooks with dlsym on the main program, so the executable
    // has to export its symbols dynamically.
    match std::env::var("CARGO_CFG_TARGET_VENDOR").as_deref() {
        Ok("apple") => println!("cargo::rustc-link-arg-bins=-Wl,-export_dynamic"),
        _ => println!("cargo::rustc-link-arg-bins=-rdynamic"),
    }
}
