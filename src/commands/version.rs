use crate::ui;

pub fn run() {
    println!("orgsync {}", env!("CARGO_PKG_VERSION"));
    ui::dim(&format!(
        "{} {}/{}",
        env!("CARGO_PKG_DESCRIPTION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    ));
}
