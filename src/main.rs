fn main() {
    radiomap_pipeline::cli::run();
}
