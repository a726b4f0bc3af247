// Bakes build metadata into `hostlink version --extended`.
fn main() {
    for (var, exported) in [("TARGET", "HOSTLINK_BUILD_TARGET"), ("PROFILE", "HOSTLINK_BUILD_PROFILE")] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
