//! Encode operations into display frames.

use anyhow::{bail, Context, Result};

use airgap_core::AirGap;

use super::read_input;

/// `<op>=<path>` as given on the command line.
#[derive(Debug, PartialEq, Eq)]
struct OpArg<'a> {
    op_code: u16,
    path: &'a str,
}

fn parse_op_code(text: &str) -> Result<u16> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("operation code {:?} is not a number in 0..=65535", text))
}

fn parse_op_arg(arg: &str) -> Result<OpArg<'_>> {
    let Some((op, path)) = arg.split_once('=') else {
        bail!("expected <op>=<path>, got {:?}", arg);
    };
    if path.is_empty() {
        bail!("missing path for operation {:?}", op);
    }
    Ok(OpArg {
        op_code: parse_op_code(op)?,
        path,
    })
}

pub fn cmd_encode(airgap: &AirGap, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        bail!("encode needs at least one <op>=<path> argument");
    }
    let ops = args
        .iter()
        .map(|arg| parse_op_arg(arg))
        .collect::<Result<Vec<_>>>()?;
    if ops.iter().filter(|op| op.path == "-").count() > 1 {
        bail!("stdin can feed only one operation");
    }

    let mut message = airgap.create_message();
    for op in &ops {
        let data = read_input(op.path)?;
        tracing::debug!(op_code = op.op_code, bytes = data.len(), path = op.path, "operation added");
        message = message.add_operation(op.op_code, data);
    }

    let frames = message.marshal_chunks().context("failed to encode message")?;
    tracing::info!(
        operations = ops.len(),
        frames = frames.len(),
        chunk_size = airgap.chunk_size(),
        encrypted = airgap.is_encrypted(),
        "message encoded"
    );

    for frame in &frames {
        println!("{}", frame);
    }
    Ok(())
}
