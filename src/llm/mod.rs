pub mod openai;
pub mod provider;

pub const DESCRIBE_PLOT_PROMPT: &str = "Describe the plot that this code generates. Start with \"This plot shows...\". Specify the plot type, and the x and y axis if applicable. Describe what variables are used. Detail the aggregation method if applicable. Do not talk about the code, only about the plot itself. Keep the description short.";
