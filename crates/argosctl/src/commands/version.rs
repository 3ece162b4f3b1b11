use anyhow::Result;

pub async fn execute() -> Result<()> {
    println!("argosctl {}", argos_core::VERSION);
    println!("MCP protocol {}", argos_mcp::MCP_VERSION);
    println!("Built-in tools: {}", argos_tools::builtin_plugins().len());
    Ok(())
}
