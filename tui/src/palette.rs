use cursive::{
    theme::{BaseColor, Color, PaletteColor},
    Cursive,
};
use montse::preferences::Theme;

pub fn apply(siv: &mut Cursive, theme: Theme) {
    siv.with_theme(|t| {
        t.shadow = false;
        let palette = &mut t.palette;
        match theme {
            Theme::Light => {
                palette[PaletteColor::Background] = Color::Light(BaseColor::White);
                palette[PaletteColor::View] = Color::Light(BaseColor::White);
                palette[PaletteColor::Primary] = Color::Dark(BaseColor::Black);
                palette[PaletteColor::Secondary] = Color::Dark(BaseColor::Blue);
                palette[PaletteColor::TitlePrimary] = Color::Dark(BaseColor::Magenta);
                palette[PaletteColor::Highlight] = Color::Dark(BaseColor::Magenta);
                palette[PaletteColor::HighlightText] = Color::Light(BaseColor::White);
            }
            Theme::Dark => {
                palette[PaletteColor::Background] = Color::Dark(BaseColor::Black);
                palette[PaletteColor::View] = Color::Dark(BaseColor::Black);
                palette[PaletteColor::Primary] = Color::Light(BaseColor::White);
                palette[PaletteColor::Secondary] = Color::Light(BaseColor::Cyan);
                palette[PaletteColor::TitlePrimary] = Color::Light(BaseColor::Magenta);
                palette[PaletteColor::Highlight] = Color::Light(BaseColor::Magenta);
                palette[PaletteColor::HighlightText] = Color::Dark(BaseColor::Black);
            }
        }
    });
}
