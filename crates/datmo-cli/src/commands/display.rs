//! Display model inspection command.

use anyhow::{Result, bail};

use crate::DisplayCmdArgs;

pub fn run(args: DisplayCmdArgs) -> Result<()> {
    if args.samples < 2 {
        bail!("--samples must be at least 2");
    }
    let display = super::build_display(&args.display)?;
    let (lo, hi) = display.log_range();

    println!("{display:?}");
    println!("  Black:   {:.4} cd/m2", display.display(0.0));
    println!("  White:   {:.2} cd/m2", display.display(1.0));
    println!("  Range:   [{lo:.3}, {hi:.3}] log10 cd/m2 ({:.2} decades)", hi - lo);
    println!();
    println!("  pixel   luminance");
    for i in 0..args.samples {
        let p = i as f32 / (args.samples - 1) as f32;
        println!("  {p:.3}   {:.4}", display.display(p));
    }
    Ok(())
}
