use anyhow::{Result, anyhow};
use poise::serenity_prelude::{
    Colour, CreateComponent, CreateContainer, CreateContainerComponent, CreateInputText,
    CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateLabel, CreateModal, CreateModalComponent,
    CreateTextDisplay, InputTextStyle, Label, LabelComponent, MessageFlags, ModalComponent,
};

pub fn text_container(text: String, color: Colour) -> CreateComponent<'static> {
    CreateComponent::Container(
        CreateContainer::new(vec![CreateContainerComponent::TextDisplay(
            CreateTextDisplay::new(text),
        )])
        .accent_color(color),
    )
}

/// Ephemeral single-container response, the standard shape for interaction
/// feedback messages.
pub fn ephemeral_notice(text: String, color: Colour) -> CreateInteractionResponse<'static> {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::default()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![text_container(text, color)])
            .ephemeral(true),
    )
}

/// Builds a modal containing a single paragraph text input.
pub fn paragraph_modal(
    custom_id: String,
    title: String,
    field_id: &'static str,
    label: String,
    prefill: Option<String>,
) -> CreateModal<'static> {
    let mut input = CreateInputText::new(InputTextStyle::Paragraph, field_id)
        .max_length(512)
        .required(true);
    if let Some(value) = prefill {
        input = input.value(value);
    }

    CreateModal::new(custom_id, title).components(vec![CreateModalComponent::Label(
        CreateLabel::input_text(label, input),
    )])
}

/// Extracts the trimmed value of a text input from submitted modal data.
pub fn modal_input_value(components: &[ModalComponent], field_id: &str) -> Result<String> {
    for component in components {
        if let ModalComponent::Label(Label {
            component: LabelComponent::InputText(input),
            ..
        }) = component
            && input.custom_id == field_id
        {
            let value = input.value.clone();
            return Ok(value.trim().to_string());
        }
    }

    Err(anyhow!(
        "Invalid modal data: Missing input field: {field_id}"
    ))
}
