/// Delegates to nih_plug_xtask for the `bundle` subcommand:
///
///   cargo xtask bundle lcr-delay --release
///
/// Builds the cdylib and packages it as `target/bundled/LCR Delay.vst3`
/// and `target/bundled/LCR Delay.clap`.
fn main() -> nih_plug_xtask::Result<()> {
    nih_plug_xtask::main()
}
