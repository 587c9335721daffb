fn main() {
    uniffi::generate_scaffolding("src/callroom.udl").unwrap();
}
