use crate::models::GenerationRequest;

/// Suffixes appended to the base prompt for every variant after the first,
/// picked by `index % 5`, to keep a batch from producing near-identical pages.
pub const VARIATION_SUFFIXES: [&str; 5] = [
    "Use a different composition and arrangement of the main elements.",
    "Show the subject from a different angle or viewpoint.",
    "Change the pose and placement of the main subject.",
    "Add a different supporting background scene.",
    "Use a fresh layout with the main subject slightly off-center.",
];

/// Build the instruction text sent to the image model.
/// Pure and total: unknown catalog ids fall back to their raw id.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let guidance = request.age_group.guidance();
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Create a printable black-and-white {} worksheet for an art class.\n\n",
        request.technique.label().to_lowercase()
    ));

    prompt.push_str("STYLE REQUIREMENTS:\n");
    prompt.push_str(&format!("- Technique: {}\n", request.technique.description()));
    prompt.push_str("- Pure black lines on a plain white background, no gray fills or color\n");
    prompt.push_str("- Portrait A4 page layout with comfortable margins for printing\n");
    prompt.push_str("- No text, letters, logos or signatures anywhere on the page\n");
    match request.style.as_deref().map(str::trim) {
        Some(style) if !style.is_empty() => {
            prompt.push_str(&format!("- Artistic style: {}\n", style));
        }
        _ => prompt.push_str("- Artistic style: clean, friendly illustration\n"),
    }

    prompt.push_str("\nCONTENT:\n");
    prompt.push_str(&format!(
        "- Theme: {} ({})\n",
        request.theme.label(),
        request.theme.description()
    ));
    prompt.push_str(&format!("- Subject: {}\n", request.sub_theme.trim()));

    prompt.push_str(&format!(
        "\nAGE-APPROPRIATE GUIDANCE ({}):\n",
        request.age_group.label()
    ));
    prompt.push_str(&format!("- Line weight: {}\n", guidance.line_weight));
    prompt.push_str(&format!("- Number of elements: {}\n", guidance.element_count));
    prompt.push_str(&format!("- Complexity: {}\n", guidance.complexity));

    // Out-of-range difficulties are described as the middle level
    let level = if (1..=5).contains(&request.difficulty) {
        request.difficulty
    } else {
        3
    };
    prompt.push_str(&format!("\nDIFFICULTY LEVEL {}/5:\n", level));
    for bullet in difficulty_bullets(request.difficulty) {
        prompt.push_str(&format!("- {}\n", bullet));
    }

    if let Some(details) = request.additional_details.as_deref().map(str::trim) {
        if !details.is_empty() {
            prompt.push_str("\nADDITIONAL DETAILS:\n");
            prompt.push_str(details);
            prompt.push('\n');
        }
    }

    prompt
}

fn difficulty_bullets(difficulty: u8) -> [&'static str; 3] {
    match difficulty {
        1 => [
            "Very large, simple shapes that are easy to stay inside",
            "Minimal detail and no small enclosed areas",
            "Plenty of open white space",
        ],
        2 => [
            "Large shapes with a few simple details",
            "Small areas kept to a minimum",
            "Clear separation between elements",
        ],
        4 => [
            "Many detailed areas and smaller enclosed shapes",
            "Textures and decorative patterns inside the main shapes",
            "Layered elements with some overlap",
        ],
        5 => [
            "Highly detailed and intricate linework",
            "Many small enclosed areas and fine decorative patterns",
            "Dense, layered composition that fills the page",
        ],
        // 3 and anything out of range
        _ => [
            "A balanced mix of large and medium shapes",
            "Moderate detail with some decorative touches",
            "Elements clearly separated with a little overlap",
        ],
    }
}

/// Prompt for variant `index` of a batch built from `base`.
pub fn variation_prompt(base: &str, index: usize) -> String {
    if index == 0 {
        return base.to_string();
    }
    format!(
        "{}\nVARIATION:\n{}\n",
        base,
        VARIATION_SUFFIXES[index % VARIATION_SUFFIXES.len()]
    )
}
