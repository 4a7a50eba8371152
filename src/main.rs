fn main() {
    ecomap_pipeline::cli::run();
}
