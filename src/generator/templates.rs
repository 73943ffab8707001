//! The five fixed templates a descriptor is compiled through.
//!
//! Placeholders use `{{ expr }}` syntax:
//!
//! - `identifier`, `snake_name`: the canonical identifier and its file-name form
//! - `descriptor.<dotted.path>`: a descriptor field (`descriptor.container-image.image`)
//! - `schema.<dotted.path>`: schema metadata (`schema.$id`)
//! - `helper.<name>`: output of a pure helper (aligned declarations, form rows)
//!
//! A trailing `?` makes a descriptor or schema reference optional (renders as
//! null/empty when absent); without it a missing field is a generation error.
//! Filters follow `|`: `json` renders the value as a JSON literal, `html`
//! escapes it for markup.
//!
//! The definition templates produce task definition source: one directive per
//! line, string values as JSON literals, parameters as aligned calls.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kinds of generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Task definition loaded in the submitting (client) context.
    ClientDefinition,
    /// Task definition loaded in the executing (worker) context.
    WorkerDefinition,
    /// Parameter-entry form partial.
    ParamsTemplate,
    /// Results/parameter display partial.
    ShowTemplate,
    /// Stand-alone inline help page.
    HelpTemplate,
}

impl ArtifactKind {
    /// Every kind, in rendering order.
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::ClientDefinition,
        ArtifactKind::WorkerDefinition,
        ArtifactKind::ParamsTemplate,
        ArtifactKind::ShowTemplate,
        ArtifactKind::HelpTemplate,
    ];

    /// Stable kebab-case name, also used as the template name in errors.
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::ClientDefinition => "client-definition",
            ArtifactKind::WorkerDefinition => "worker-definition",
            ArtifactKind::ParamsTemplate => "params-template",
            ArtifactKind::ShowTemplate => "show-template",
            ArtifactKind::HelpTemplate => "help-template",
        }
    }

    /// The template body this kind is rendered from.
    pub fn template(self) -> &'static str {
        match self {
            ArtifactKind::ClientDefinition => CLIENT_DEFINITION_TEMPLATE,
            ArtifactKind::WorkerDefinition => WORKER_DEFINITION_TEMPLATE,
            ArtifactKind::ParamsTemplate => PARAMS_TEMPLATE,
            ArtifactKind::ShowTemplate => SHOW_TEMPLATE,
            ArtifactKind::HelpTemplate => HELP_TEMPLATE,
        }
    }

    /// Path of this artifact relative to the export root of a plugin whose
    /// snake-case name is `snake_name`.
    pub fn export_path(self, snake_name: &str) -> PathBuf {
        match self {
            ArtifactKind::ClientDefinition => {
                PathBuf::from("client").join(format!("{}.{}", snake_name, DEFINITION_EXTENSION))
            }
            ArtifactKind::WorkerDefinition => {
                PathBuf::from("worker").join(format!("{}.{}", snake_name, DEFINITION_EXTENSION))
            }
            ArtifactKind::ParamsTemplate => PathBuf::from("views").join("_task_params.html"),
            ArtifactKind::ShowTemplate => PathBuf::from("views").join("_show_params.html"),
            ArtifactKind::HelpTemplate => PathBuf::from("views")
                .join("public")
                .join("edit_params_help.html"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three UI templates exposed by a loaded plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Parameter-entry form.
    TaskParams,
    /// Parameter display.
    ShowParams,
    /// Inline help page.
    Help,
}

impl ViewKind {
    /// Every view kind.
    pub const ALL: [ViewKind; 3] = [ViewKind::TaskParams, ViewKind::ShowParams, ViewKind::Help];

    /// The artifact holding this view's body.
    pub fn artifact(self) -> ArtifactKind {
        match self {
            ViewKind::TaskParams => ArtifactKind::ParamsTemplate,
            ViewKind::ShowParams => ArtifactKind::ShowTemplate,
            ViewKind::Help => ArtifactKind::HelpTemplate,
        }
    }
}

/// File extension of generated task definitions.
pub const DEFINITION_EXTENSION: &str = "task";

/// Client-side task definition.
pub const CLIENT_DEFINITION_TEMPLATE: &str = r#"# {{identifier}}: client task definition
# Generated from descriptor {{descriptor.name | json}}; regenerate instead of editing.
# schema {{schema.$id? | json}}
task {{identifier}}
context client
tool {{descriptor.name | json}}
version {{descriptor.tool-version | json}}
description {{descriptor.description? | json}}
image {{helper.docker_image | json}}
{{helper.input_declarations}}
{{helper.output_declarations}}
end
"#;

/// Worker-side task definition; unlike the client side it carries the
/// command line.
pub const WORKER_DEFINITION_TEMPLATE: &str = r#"# {{identifier}}: worker task definition
# Generated from descriptor {{descriptor.name | json}}; regenerate instead of editing.
# schema {{schema.$id? | json}}
task {{identifier}}
context worker
tool {{descriptor.name | json}}
version {{descriptor.tool-version | json}}
description {{descriptor.description? | json}}
image {{helper.docker_image | json}}
command {{descriptor.command-line | json}}
{{helper.input_declarations}}
{{helper.output_declarations}}
end
"#;

/// Parameter-entry form partial.
pub const PARAMS_TEMPLATE: &str = r#"<!-- {{identifier}} parameter form -->
<div class="task-params" data-task="{{identifier}}" data-version="{{descriptor.tool-version | html}}">
  <p class="task-params-help">
    <a href="/help/{{identifier}}_help.html" target="_blank">Help for {{descriptor.name | html}}</a>
  </p>
  <table class="task-params-table">
{{helper.params_form_rows}}
  </table>
</div>
"#;

/// Parameter display partial.
pub const SHOW_TEMPLATE: &str = r#"<!-- {{identifier}} parameter summary -->
<table class="task-show-params" data-task="{{identifier}}">
  <tr><th>Tool</th><td>{{descriptor.name | html}} {{descriptor.tool-version | html}}</td></tr>
  <tr><th>Image</th><td>{{helper.docker_image | html}}</td></tr>
{{helper.show_rows}}
</table>
"#;

/// Stand-alone help page.
pub const HELP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{descriptor.name | html}} {{descriptor.tool-version | html}}</title>
</head>
<body>
  <h1>{{descriptor.name | html}} <small>{{descriptor.tool-version | html}}</small></h1>
  <p class="description">{{descriptor.description? | html}}</p>
  <h2>Parameters</h2>
  <dl class="parameters">
{{helper.help_input_rows}}
  </dl>
  <h2>Outputs</h2>
  <dl class="outputs">
{{helper.help_output_rows}}
  </dl>
  <p class="container">Container image: <code>{{helper.docker_image | html}}</code></p>
</body>
</html>
"#;
