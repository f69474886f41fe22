/// Heading above the spot list.
pub fn spots_label(n: usize) -> String {
    let noun = if n == 1 {
        "CAFÉ SÉLECTIONNÉ"
    } else {
        "CAFÉS SÉLECTIONNÉS"
    };
    format!("NOS {n} {noun} POUR VOUS :")
}
