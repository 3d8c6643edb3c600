// Build script that compiles the protobuf definitions into Rust code.
//
// Generates client and server stubs for StateService and writes a file
// descriptor set next to the proto source so the server can register a
// gRPC reflection service from it.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path("proto/vakeel_way_descriptor.bin")
        .compile(&["proto/vakeel_way.proto"], &["proto"])?;
    Ok(())
}
