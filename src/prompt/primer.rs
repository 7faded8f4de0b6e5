use crate::dataset::{Dataset, column_notes};

/// Instruction text and code preamble that steer the model towards a reply
/// which continues the preamble as runnable plotting code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primer {
    pub description: String,
    pub code: String,
}

/// Python expression that evaluates to the named dataset inside the session.
pub fn dataset_reference(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("datasets[\"{escaped}\"]")
}

pub fn build_primer(dataset: &Dataset) -> Primer {
    let column_list = dataset
        .columns()
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join("','");

    let mut description =
        format!("Use a dataframe called df from data_file.csv with columns '{column_list}'. ");
    for note in column_notes(dataset) {
        description.push('\n');
        description.push_str(&note);
    }
    description.push_str("\nLabel the x and y axes appropriately.");
    description.push_str("\nAdd a title. Set the fig suptitle as empty.");
    description.push_str(
        "\nPut your reasoning of why you chose the specific plot type and other reasons of how you came up with the plot according to the prompt in a long string and store it in a variable named \"reasoning\"",
    );
    description
        .push_str("\nUsing Python 3, create a script using the dataframe df to graph the following: ");

    let mut code = String::from("import pandas as pd\nimport matplotlib.pyplot as plt\n");
    code.push_str("fig,ax = plt.subplots(1,1,figsize=(10,4))\n");
    code.push_str("ax.spines['top'].set_visible(False)\nax.spines['right'].set_visible(False)\n");
    code.push_str(&format!("df={}.copy()\n", dataset_reference(dataset.name())));

    Primer { description, code }
}

/// The full user content for the show path: the description and the request
/// inside a docstring, followed directly by the code preamble.
pub fn assemble_question(primer: &Primer, question: &str) -> String {
    format!(
        "\"\"\"\n{}{}\n\"\"\"\n{}",
        primer.description, question, primer.code
    )
}
