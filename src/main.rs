fn main() -> std::process::ExitCode {
    snipcopy_lib::run()
}
