use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Use the vendored protoc so builds do not depend on a system install.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed=proto/rag_service.proto");
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(&["proto/rag_service.proto"], &["proto"])?;

    Ok(())
}
