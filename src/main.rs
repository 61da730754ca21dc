fn main() {
    notes_browser_lib::run()
}
