fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::compile_protos("proto/swarm.proto")?;
    println!("cargo:rerun-if-changed=proto/swarm.proto");
    Ok(())
}
