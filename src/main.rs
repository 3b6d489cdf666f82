fn main() {
    kms_renderer::cli::main();
}
