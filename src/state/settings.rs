use crate::state::{
    mutation::{BrandingPatch, EconomicsPatch, Rejection},
    tournament::TournamentDocument,
};

/// Players already registered keep the stack they entered with.
pub(crate) fn update_economics(
    doc: &mut TournamentDocument,
    patch: &EconomicsPatch,
) -> Result<(), Rejection> {
    if *patch == EconomicsPatch::default() {
        return Err(Rejection::EmptyPatch);
    }
    let economics = &mut doc.economics;
    economics.initial_chips = patch.initial_chips.unwrap_or(economics.initial_chips);
    economics.rebuy_chips = patch.rebuy_chips.unwrap_or(economics.rebuy_chips);
    economics.addon_chips = patch.addon_chips.unwrap_or(economics.addon_chips);
    economics.entry_fee = patch.entry_fee.unwrap_or(economics.entry_fee);
    economics.rebuy_fee = patch.rebuy_fee.unwrap_or(economics.rebuy_fee);
    economics.addon_fee = patch.addon_fee.unwrap_or(economics.addon_fee);
    Ok(())
}

pub(crate) fn rename(doc: &mut TournamentDocument, name: &str) -> Result<(), Rejection> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Rejection::EmptyName);
    }
    doc.name = name.to_string();
    Ok(())
}

pub(crate) fn update_branding(
    doc: &mut TournamentDocument,
    patch: &BrandingPatch,
) -> Result<(), Rejection> {
    if *patch == BrandingPatch::default() {
        return Err(Rejection::EmptyPatch);
    }
    if let Some(background) = &patch.background_image {
        doc.background_image = background.clone();
    }
    if let Some(logo) = &patch.club_logo {
        doc.club_logo = logo.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tournament::TournamentTemplate;

    #[test]
    fn economics_patch_leaves_players_alone() {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        crate::state::roster::add_player(&mut doc, "Alice").unwrap();

        update_economics(
            &mut doc,
            &EconomicsPatch {
                initial_chips: Some(20_000),
                addon_fee: Some(2_000),
                ..EconomicsPatch::default()
            },
        )
        .unwrap();

        assert_eq!(doc.economics.initial_chips, 20_000);
        assert_eq!(doc.economics.addon_fee, 2_000);
        assert_eq!(doc.economics.rebuy_fee, 1_000);
        assert_eq!(doc.players[&1].initial_chips, 10_000);
    }

    #[test]
    fn branding_sets_and_clears() {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        update_branding(
            &mut doc,
            &BrandingPatch {
                club_logo: Some(Some("logo".into())),
                background_image: Some(Some("bg".into())),
            },
        )
        .unwrap();
        update_branding(
            &mut doc,
            &BrandingPatch {
                background_image: Some(None),
                ..BrandingPatch::default()
            },
        )
        .unwrap();

        assert_eq!(doc.club_logo.as_deref(), Some("logo"));
        assert_eq!(doc.background_image, None);
    }

    #[test]
    fn rename_requires_a_name() {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        assert_eq!(rename(&mut doc, " "), Err(Rejection::EmptyName));
        rename(&mut doc, "Friday night").unwrap();
        assert_eq!(doc.name, "Friday night");
    }
}
