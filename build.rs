fn main() {
    // The webview shell needs the generated Tauri context; the headless core does not.
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }
}
